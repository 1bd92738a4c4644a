//! Tree navigation and scoped identifier search
//!
//! Search expressions are segments joined by the separator character. A
//! leading separator anchors the search at the root of the tree; otherwise
//! it starts at the closest naming container enclosing the base component.
//! A base that is itself a naming container searches its own interior
//! first and falls back outward on a miss. Each segment resolves within
//! one naming-container scope: nested naming containers match by id but
//! are never descended into.
//!
//! Resolution is total: any failure, including a non-container showing up
//! mid-expression, yields `None` rather than an error.

use crate::error::Result;
use crate::tree::ComponentHandle;
use crate::types::SEPARATOR_CHAR;

/// Visit a subtree children-before-self: facets (in facet order), then
/// children (in child order), each recursively, then the node itself.
///
/// Every phase processor is a policy layer over this traversal. The first
/// error stops the walk and propagates.
pub fn visit_children_first<F>(node: &ComponentHandle, f: &mut F) -> Result<()>
where
    F: FnMut(&ComponentHandle) -> Result<()>,
{
    let kids = node.borrow().facets_and_children();
    for kid in kids {
        visit_children_first(&kid, f)?;
    }
    f(node)
}

/// Topmost ancestor of the given component
pub fn root_of(node: &ComponentHandle) -> ComponentHandle {
    let mut current = node.clone();
    loop {
        let parent = current.borrow().parent();
        match parent {
            Some(parent) => current = parent,
            None => return current,
        }
    }
}

/// The naming-container scope a relative search starts from: the base
/// itself when it is a naming container, otherwise its closest naming
/// container ancestor, otherwise the root.
fn enclosing_scope(base: &ComponentHandle) -> ComponentHandle {
    if base.borrow().is_naming_container() {
        return base.clone();
    }
    let mut current = base.clone();
    loop {
        let parent = current.borrow().parent();
        match parent {
            Some(parent) => {
                if parent.borrow().is_naming_container() {
                    return parent;
                }
                current = parent;
            }
            None => return current,
        }
    }
}

/// Find the component with the given id inside one naming-container scope.
///
/// Checks the scope component itself, then its facets and children in
/// traversal order. Nested naming containers are matched by id but their
/// contents are out of scope.
fn search_within(scope: &ComponentHandle, id: &str) -> Option<ComponentHandle> {
    if scope.borrow().id() == id {
        return Some(scope.clone());
    }
    search_below(scope, id)
}

fn search_below(node: &ComponentHandle, id: &str) -> Option<ComponentHandle> {
    let kids = node.borrow().facets_and_children();
    for kid in kids {
        if kid.borrow().id() == id {
            return Some(kid);
        }
        let bounded = kid.borrow().is_naming_container();
        if !bounded {
            if let Some(found) = search_below(&kid, id) {
                return Some(found);
            }
        }
    }
    None
}

/// Resolve a search expression relative to a base component.
///
/// A naming-container base searches its own interior first and, on a
/// miss, falls back outward to the scope enclosing it.
///
/// Returns `None` when the expression is empty, a segment is empty, a
/// segment does not resolve, or an intermediate segment resolves to a
/// component that is not a naming container.
pub fn find_component(base: &ComponentHandle, expr: &str) -> Option<ComponentHandle> {
    let (rest, scopes) = match expr.strip_prefix(SEPARATOR_CHAR) {
        Some(stripped) => (stripped, vec![root_of(base)]),
        None if base.borrow().is_naming_container() => {
            let mut scopes = vec![base.clone()];
            if let Some(parent) = base.borrow().parent() {
                scopes.push(enclosing_scope(&parent));
            }
            (expr, scopes)
        }
        None => (expr, vec![enclosing_scope(base)]),
    };
    if rest.is_empty() {
        return None;
    }

    let segments: Vec<&str> = rest.split(SEPARATOR_CHAR).collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return None;
    }

    let mut current = scopes
        .iter()
        .find_map(|scope| search_within(scope, segments[0]))?;
    for segment in &segments[1..] {
        if !current.borrow().is_naming_container() {
            return None;
        }
        current = search_within(&current, segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{FormBehavior, OutputBehavior, PanelBehavior};
    use crate::tree::{add_child, set_facet, Component};

    /// root (panel)
    ///  └─ outer (form)
    ///      ├─ header facet: heading (output)
    ///      ├─ name (output)
    ///      └─ inner (form)
    ///          └─ name (output)   <- shadows outer's "name" inside inner
    fn make_tree() -> (
        ComponentHandle,
        ComponentHandle,
        ComponentHandle,
        ComponentHandle,
        ComponentHandle,
    ) {
        let root = Component::new("root", Box::new(PanelBehavior)).unwrap();
        let outer = Component::new("outer", Box::new(FormBehavior)).unwrap();
        let heading = Component::new("heading", Box::<OutputBehavior>::default()).unwrap();
        let outer_name = Component::new("name", Box::<OutputBehavior>::default()).unwrap();
        let inner = Component::new("inner", Box::new(FormBehavior)).unwrap();
        let inner_name = Component::new("name", Box::<OutputBehavior>::default()).unwrap();

        add_child(&root, outer.clone()).unwrap();
        set_facet(&outer, "header", heading).unwrap();
        add_child(&outer, outer_name.clone()).unwrap();
        add_child(&outer, inner.clone()).unwrap();
        add_child(&inner, inner_name.clone()).unwrap();

        (root, outer, outer_name, inner, inner_name)
    }

    #[test]
    fn test_relative_search_within_enclosing_container() {
        let (_root, _outer, outer_name, _inner, inner_name) = make_tree();

        // from a leaf, "name" resolves within its own container
        let found = find_component(&inner_name, "name").unwrap();
        assert!(ComponentHandle::ptr_eq(&found, &inner_name));

        let found = find_component(&outer_name, "name").unwrap();
        assert!(ComponentHandle::ptr_eq(&found, &outer_name));
    }

    #[test]
    fn test_nested_containers_are_not_descended() {
        let (_, outer, outer_name, _, _) = make_tree();

        // from outer's scope, "name" is outer's child, never inner's
        let found = find_component(&outer, "name").unwrap();
        assert!(ComponentHandle::ptr_eq(&found, &outer_name));
    }

    #[test]
    fn test_absolute_and_compound_expressions() {
        let (root, _, outer_name, _, inner_name) = make_tree();

        let found = find_component(&inner_name, ":outer:name").unwrap();
        assert!(ComponentHandle::ptr_eq(&found, &outer_name));

        let found = find_component(&root, "outer:inner:name").unwrap();
        assert!(ComponentHandle::ptr_eq(&found, &inner_name));
    }

    #[test]
    fn test_container_base_falls_back_to_outer_scope() {
        let (_root, _outer, outer_name, inner, inner_name) = make_tree();

        // "heading" is not inside inner; the search falls back to outer's
        // scope and finds the facet
        let found = find_component(&inner, "heading").unwrap();
        assert_eq!(found.borrow().id(), "heading");

        // the interior still wins over the outer scope when both match
        let found = find_component(&inner, "name").unwrap();
        assert!(ComponentHandle::ptr_eq(&found, &inner_name));
        assert!(!ComponentHandle::ptr_eq(&found, &outer_name));
    }

    #[test]
    fn test_facets_participate_in_search() {
        let (root, _, _, _, _) = make_tree();
        let found = find_component(&root, "outer:heading").unwrap();
        assert_eq!(found.borrow().id(), "heading");
    }

    #[test]
    fn test_failures_resolve_to_none() {
        let (root, _, outer_name, _, _) = make_tree();

        assert!(find_component(&root, "missing").is_none());
        assert!(find_component(&root, "").is_none());
        assert!(find_component(&root, ":").is_none());
        // intermediate segment is not a naming container
        assert!(find_component(&root, "outer:name:deeper").is_none());
        // empty segment
        assert!(find_component(&outer_name, "outer::name").is_none());
    }

    #[test]
    fn test_root_of_walks_to_the_top() {
        let (root, _, _, _, inner_name) = make_tree();
        assert!(ComponentHandle::ptr_eq(&root_of(&inner_name), &root));
    }
}
