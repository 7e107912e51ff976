//! Recipe registry.
//!
//! Maps the import path of an instrumented library to the recipe that
//! rewrites its call sites. The registry is an explicit value handed to the
//! rewrite engine rather than a global, so every command and test decides
//! which recipes are in play.

use crate::recipes::{self, Recipe};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Recipes = HashMap<String, Arc<dyn Recipe>>;

#[derive(Default)]
pub struct Registry {
    recipes: Mutex<Recipes>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in recipe.
    pub fn with_default_recipes() -> Self {
        let registry = Self::new();
        recipes::register_defaults(&registry);
        registry
    }

    fn lock(&self) -> MutexGuard<'_, Recipes> {
        self.recipes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds `recipe` to `import_path`, replacing any previous binding.
    pub fn register(&self, import_path: impl Into<String>, recipe: Arc<dyn Recipe>) {
        self.lock().insert(import_path.into(), recipe);
    }

    /// Removes the binding for `import_path`; returns whether there was one.
    pub fn unregister(&self, import_path: &str) -> bool {
        self.lock().remove(import_path).is_some()
    }

    /// Import path of the instrumentation library the recipe for
    /// `import_path` adds to rewritten files.
    pub fn import_path_for(&self, import_path: &str) -> Option<&'static str> {
        self.lock().get(import_path).map(|recipe| recipe.import_path())
    }

    pub fn recipe_for(&self, import_path: &str) -> Option<Arc<dyn Recipe>> {
        self.lock().get(import_path).cloned()
    }

    /// Registered import paths, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.lock().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::ast::File;

    struct Fake(&'static str);

    impl Recipe for Fake {
        fn import_path(&self) -> &'static str {
            self.0
        }

        fn instrument(&self, _unit: &mut File, _target: &str, _sensor: &str) -> bool {
            false
        }
    }

    #[test]
    fn last_registration_wins() {
        let registry = Registry::new();
        registry.register("example.com/lib", Arc::new(Fake("example.com/insta/one")));
        registry.register("example.com/lib", Arc::new(Fake("example.com/insta/two")));
        assert_eq!(registry.import_path_for("example.com/lib"), Some("example.com/insta/two"));
    }

    #[test]
    fn unbound_paths_have_no_recipe() {
        let registry = Registry::new();
        assert!(registry.recipe_for("example.com/lib").is_none());
        assert_eq!(registry.import_path_for("example.com/lib"), None);
        assert!(!registry.unregister("example.com/lib"));
    }

    #[test]
    fn unregister_excludes_a_library() {
        let registry = Registry::with_default_recipes();
        assert!(registry.unregister("net/http"));
        assert!(registry.recipe_for("net/http").is_none());
        assert!(!registry.list().contains(&"net/http".to_string()));
    }

    #[test]
    fn default_recipes_are_listed_sorted() {
        let list = Registry::with_default_recipes().list();
        assert_eq!(
            list,
            vec![
                "database/sql",
                "github.com/Shopify/sarama",
                "github.com/aws/aws-lambda-go/lambda",
                "github.com/aws/aws-sdk-go/aws/session",
                "github.com/gin-gonic/gin",
                "github.com/gorilla/mux",
                "github.com/julienschmidt/httprouter",
                "github.com/labstack/echo/v4",
                "go.mongodb.org/mongo-driver/mongo",
                "google.golang.org/grpc",
                "net/http",
            ]
        );
    }

    #[test]
    fn concurrent_registration_is_safe() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.register(
                        format!("example.com/lib{i}"),
                        Arc::new(Fake("example.com/insta")),
                    );
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.list().len(), 8);
    }
}
