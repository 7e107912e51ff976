/// LIFO of the contexts enclosing the traversal position.
#[derive(Debug)]
pub struct Stack<T> {
    items: Vec<T>,
}

impl<T> Default for Stack<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Stack<T> {
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Nearest enclosing context.
    pub fn top(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut T> {
        self.items.last_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_follows_pushes_and_pops() {
        let mut stack = Stack::default();
        assert!(stack.top().is_none());
        stack.push(1);
        stack.push(2);
        assert_eq!(stack.top(), Some(&2));
        if let Some(top) = stack.top_mut() {
            *top = 3;
        }
        assert_eq!(stack.pop(), Some(3));
        assert_eq!(stack.top(), Some(&1));
        stack.pop();
        assert!(stack.pop().is_none());
    }
}
