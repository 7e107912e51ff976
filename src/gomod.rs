//! Just enough of `go.mod` to tell which modules a package can import.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoMod {
    pub path: PathBuf,
    pub module: String,
    pub requires: Vec<String>,
}

impl GoMod {
    /// Nearest `go.mod` in `dir` or one of its ancestors.
    pub fn find(dir: &Path) -> Result<Option<Self>> {
        for ancestor in dir.ancestors() {
            let path = ancestor.join("go.mod");
            if path.is_file() {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                return Ok(Some(Self::parse(path, &text)));
            }
        }
        Ok(None)
    }

    pub fn parse(path: PathBuf, text: &str) -> Self {
        let mut module = String::new();
        let mut requires = Vec::new();
        let mut in_require = false;
        for line in text.lines() {
            let line = line.split("//").next().unwrap_or_default().trim();
            if in_require {
                if line == ")" {
                    in_require = false;
                } else if let Some(path) = first_word(line) {
                    requires.push(path);
                }
                continue;
            }
            if let Some(rest) = directive(line, "module") {
                module = first_word(rest).unwrap_or_default();
            } else if let Some(rest) = directive(line, "require") {
                if rest == "(" {
                    in_require = true;
                } else if let Some(path) = first_word(rest) {
                    requires.push(path);
                }
            }
        }
        Self { path, module, requires }
    }

    /// Reports whether `import_path` is provided by this module or one it
    /// requires.
    ///
    /// Packages below the main module belong to it. A requirement only
    /// counts when it names `import_path` itself: instrumentation packages
    /// are nested modules of their own, so requiring the sensor library
    /// does not make them importable.
    pub fn provides(&self, import_path: &str) -> bool {
        is_within(import_path, &self.module)
            || self.requires.iter().any(|module| module == import_path)
    }
}

fn is_within(import_path: &str, module: &str) -> bool {
    !module.is_empty()
        && import_path
            .strip_prefix(module)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn directive<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    rest.starts_with(char::is_whitespace).then(|| rest.trim())
}

fn first_word(text: &str) -> Option<String> {
    let word = text.split_whitespace().next()?;
    Some(word.trim_matches('"').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GO_MOD: &str = r#"module example.com/shop

go 1.21

require github.com/instana/go-sensor v1.58.0 // indirect

require (
	github.com/gin-gonic/gin v1.9.1
	"github.com/instana/go-sensor/instrumentation/instagin" v1.9.0
)
"#;

    #[test]
    fn parses_module_and_requirements() {
        let go_mod = GoMod::parse(PathBuf::from("go.mod"), GO_MOD);
        assert_eq!(go_mod.module, "example.com/shop");
        assert_eq!(
            go_mod.requires,
            vec![
                "github.com/instana/go-sensor",
                "github.com/gin-gonic/gin",
                "github.com/instana/go-sensor/instrumentation/instagin",
            ]
        );
    }

    #[test]
    fn provides_matches_whole_path_segments() {
        let go_mod = GoMod::parse(PathBuf::from("go.mod"), GO_MOD);
        assert!(go_mod.provides("github.com/instana/go-sensor"));
        assert!(go_mod.provides("github.com/instana/go-sensor/instrumentation/instagin"));
        assert!(go_mod.provides("example.com/shop/internal/db"));
        assert!(go_mod.provides("example.com/shop"));
        assert!(!go_mod.provides("github.com/gin-gonic/ginx"));
        assert!(!go_mod.provides("github.com/labstack/echo/v4"));
    }

    #[test]
    fn requiring_the_sensor_does_not_provide_nested_instrumentation_modules() {
        let go_mod = GoMod::parse(
            PathBuf::from("go.mod"),
            "module example.com/app\n\nrequire github.com/instana/go-sensor v1.58.0\n",
        );
        assert!(go_mod.provides("github.com/instana/go-sensor"));
        assert!(!go_mod.provides("github.com/instana/go-sensor/instrumentation/instagin"));
        assert!(!go_mod.provides("github.com/instana/go-sensor/instrumentation/instamux"));
    }

    #[test]
    fn finds_the_nearest_go_mod() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("cmd/server");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.path().join("go.mod"), "module example.com/app\n").unwrap();

        let go_mod = GoMod::find(&nested).unwrap().unwrap();
        assert_eq!(go_mod.module, "example.com/app");
        assert_eq!(go_mod.path, root.path().join("go.mod"));
    }
}
