use std::collections::HashMap;

/// The routing trie. Maps request paths + methods to path templates.
#[derive(Debug, Default)]
pub struct Router {
    root: Node,
}

/// A single node in the prefix trie.
#[derive(Debug, Default)]
struct Node {
    /// Static children keyed by segment name.
    static_children: HashMap<String, Node>,
    /// Parameter child (at most one per node, shared by all param names).
    param_child: Option<Box<Node>>,
    /// Method-to-route mapping at this terminal node.
    methods: HashMap<String, RouteEntry>,
}

/// A registered route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// Index into the caller's operation list.
    pub operation_index: usize,
    /// The template's parameter names, in path order.
    pub param_names: Vec<String>,
}

impl RouteEntry {
    /// Build an entry for `template`, extracting its parameter names.
    pub fn new(operation_index: usize, template: &str) -> Self {
        let param_names = parse_path_template(template)
            .into_iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name),
                Segment::Static(_) => None,
            })
            .collect();
        Self {
            operation_index,
            param_names,
        }
    }
}

/// The result of a route lookup.
#[derive(Debug, PartialEq, Eq)]
pub enum RouteMatch {
    /// Matched a path and method.
    Found {
        entry: RouteEntry,
        /// Captured (name, percent-decoded value) pairs, in path order.
        params: Vec<(String, String)>,
    },
    /// Path matched but method is not declared for it.
    MethodNotAllowed { allowed: Vec<String> },
    /// No path matched.
    NotFound,
}

/// A parsed path segment.
#[derive(Debug, Clone)]
enum Segment {
    Static(String),
    Param(String),
}

impl Router {
    /// Create a new empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a route into the trie.
    ///
    /// Path should be a template like "/users/{id}/orders". Templates that
    /// differ only in parameter names share a node; the first one inserted
    /// for a method wins and `false` is returned for the shadowed one.
    pub fn insert(&mut self, path: &str, method: &str, entry: RouteEntry) -> bool {
        let segments = parse_path_template(path);
        let node = self.traverse_or_create(&segments);
        match node.methods.entry(method.to_uppercase()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    /// Look up a request path and method.
    ///
    /// Path should be an actual request path (not a template), without query.
    /// Static segments are preferred; a templated sibling is tried when the
    /// static branch does not declare `method`.
    pub fn lookup(&self, path: &str, method: &str) -> RouteMatch {
        let normalized = normalize_path(path);
        let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
        let method = method.to_uppercase();

        let mut values = Vec::new();
        let mut allowed = None;
        match self.traverse_and_match(&self.root, &segments, &method, &mut values, &mut allowed) {
            Some(entry) => {
                let params = entry
                    .param_names
                    .iter()
                    .cloned()
                    .zip(values.iter().map(|v| percent_decode(v, false)))
                    .collect();
                RouteMatch::Found {
                    entry: entry.clone(),
                    params,
                }
            }
            None => match allowed {
                Some(allowed) => RouteMatch::MethodNotAllowed { allowed },
                None => RouteMatch::NotFound,
            },
        }
    }

    /// Traverse or create nodes for a path template.
    fn traverse_or_create(&mut self, segments: &[Segment]) -> &mut Node {
        let mut current = &mut self.root;

        for segment in segments {
            current = match segment {
                Segment::Static(name) => current.static_children.entry(name.clone()).or_default(),
                Segment::Param(_) => current.param_child.get_or_insert_with(Box::default),
            };
        }

        current
    }

    /// Traverse the trie matching actual path segments, capturing raw values.
    ///
    /// Returns the entry for `method` at the first matching node that declares
    /// it. The methods of the first matching node without it land in `allowed`.
    fn traverse_and_match<'a, 's>(
        &'a self,
        node: &'a Node,
        segments: &[&'s str],
        method: &str,
        values: &mut Vec<&'s str>,
        allowed: &mut Option<Vec<String>>,
    ) -> Option<&'a RouteEntry> {
        let Some((segment, remaining)) = segments.split_first() else {
            if let Some(entry) = node.methods.get(method) {
                return Some(entry);
            }
            if allowed.is_none() && !node.methods.is_empty() {
                let mut methods: Vec<String> = node.methods.keys().cloned().collect();
                methods.sort();
                *allowed = Some(methods);
            }
            return None;
        };

        // Static children take precedence (most specific match).
        if let Some(child) = node.static_children.get(*segment) {
            if let Some(result) = self.traverse_and_match(child, remaining, method, values, allowed)
            {
                return Some(result);
            }
        }

        if let Some(param_child) = &node.param_child {
            let len = values.len();
            values.push(segment);

            if let Some(result) =
                self.traverse_and_match(param_child, remaining, method, values, allowed)
            {
                return Some(result);
            }

            // Backtrack if this path didn't work.
            values.truncate(len);
        }

        None
    }
}

/// Parse a path template into segments.
fn parse_path_template(path: &str) -> Vec<Segment> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s.len() > 2 && s.starts_with('{') && s.ends_with('}') {
                Segment::Param(s[1..s.len() - 1].to_string())
            } else {
                Segment::Static(s.to_string())
            }
        })
        .collect()
}

/// Normalize a request path: strip trailing slashes, collapse double slashes.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len());
    let mut prev_slash = false;

    for ch in path.chars() {
        if ch == '/' {
            if !prev_slash {
                normalized.push('/');
            }
            prev_slash = true;
        } else {
            normalized.push(ch);
            prev_slash = false;
        }
    }

    // Strip trailing slash (but keep root "/")
    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }

    if normalized.is_empty() {
        "/".to_string()
    } else {
        normalized
    }
}

/// Decode `%XX` escapes (and `+` as space when `plus_as_space`).
///
/// Invalid escapes are kept verbatim; invalid UTF-8 is replaced lossily.
pub fn percent_decode(input: &str, plus_as_space: bool) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let (hi, lo) = (bytes[i + 1], bytes[i + 2]);
                let hex = (hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit())
                    .then(|| (hex_value(hi) << 4) | hex_value(lo));
                match hex {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' if plus_as_space => {
                out.push(b' ');
                i += 1;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(router: &Router, path: &str, method: &str) -> (usize, Vec<(String, String)>) {
        match router.lookup(path, method) {
            RouteMatch::Found { entry, params } => (entry.operation_index, params),
            other => panic!("expected Found for {} {}, got {:?}", method, path, other),
        }
    }

    fn insert(router: &mut Router, path: &str, method: &str, index: usize) -> bool {
        router.insert(path, method, RouteEntry::new(index, path))
    }

    // === Normalization tests ===

    #[test]
    fn normalize_strips_trailing_slash() {
        assert_eq!(normalize_path("/users/"), "/users");
    }

    #[test]
    fn normalize_collapses_double_slashes() {
        assert_eq!(normalize_path("/users//123"), "/users/123");
    }

    #[test]
    fn normalize_preserves_root() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
    }

    // === Decoding tests ===

    #[test]
    fn percent_decode_utf8_sequences() {
        assert_eq!(percent_decode("caf%C3%A9", false), "café");
        assert_eq!(percent_decode("a%20b", false), "a b");
    }

    #[test]
    fn percent_decode_plus_handling() {
        assert_eq!(percent_decode("a+b", false), "a+b");
        assert_eq!(percent_decode("a+b", true), "a b");
    }

    #[test]
    fn percent_decode_keeps_invalid_escapes() {
        assert_eq!(percent_decode("100%", false), "100%");
        assert_eq!(percent_decode("%zz", false), "%zz");
        assert_eq!(percent_decode("%4", false), "%4");
        assert_eq!(percent_decode("%+5", false), "%+5");
        assert_eq!(percent_decode("%-1x", false), "%-1x");
    }

    // === Routing tests ===

    #[test]
    fn route_static_path() {
        let mut router = Router::new();
        insert(&mut router, "/health", "GET", 0);

        let (index, params) = found(&router, "/health", "GET");
        assert_eq!(index, 0);
        assert!(params.is_empty());
    }

    #[test]
    fn route_with_multiple_parameters() {
        let mut router = Router::new();
        insert(&mut router, "/users/{userId}/orders/{orderId}", "GET", 0);

        let (_, params) = found(&router, "/users/42/orders/99", "GET");
        assert_eq!(
            params,
            vec![
                ("userId".to_string(), "42".to_string()),
                ("orderId".to_string(), "99".to_string()),
            ]
        );
    }

    #[test]
    fn captured_values_are_decoded() {
        let mut router = Router::new();
        insert(&mut router, "/files/{name}", "GET", 0);

        let (_, params) = found(&router, "/files/my%20file", "GET");
        assert_eq!(params, vec![("name".to_string(), "my file".to_string())]);
    }

    #[test]
    fn route_not_found() {
        let mut router = Router::new();
        insert(&mut router, "/users", "GET", 0);

        assert_eq!(router.lookup("/posts", "GET"), RouteMatch::NotFound);
        // Intermediate node without methods is not a match.
        insert(&mut router, "/a/b", "GET", 1);
        assert_eq!(router.lookup("/a", "GET"), RouteMatch::NotFound);
    }

    #[test]
    fn route_method_not_allowed() {
        let mut router = Router::new();
        insert(&mut router, "/users", "GET", 0);
        insert(&mut router, "/users", "POST", 1);

        assert_eq!(
            router.lookup("/users", "DELETE"),
            RouteMatch::MethodNotAllowed {
                allowed: vec!["GET".to_string(), "POST".to_string()]
            }
        );
    }

    #[test]
    fn static_takes_precedence_over_param() {
        let mut router = Router::new();
        insert(&mut router, "/users/{id}", "GET", 0);
        insert(&mut router, "/users/me", "GET", 1);

        assert_eq!(found(&router, "/users/me", "GET"), (1, vec![]));
        assert_eq!(
            found(&router, "/users/123", "GET"),
            (0, vec![("id".to_string(), "123".to_string())])
        );
    }

    #[test]
    fn falls_back_to_param_for_undeclared_method() {
        let mut router = Router::new();
        insert(&mut router, "/pets/mine", "GET", 0);
        insert(&mut router, "/pets/{petId}", "DELETE", 1);

        assert_eq!(found(&router, "/pets/mine", "GET"), (0, vec![]));
        assert_eq!(
            found(&router, "/pets/mine", "DELETE"),
            (1, vec![("petId".to_string(), "mine".to_string())])
        );
        // Neither node declares PUT; the static node's methods are reported.
        assert_eq!(
            router.lookup("/pets/mine", "PUT"),
            RouteMatch::MethodNotAllowed {
                allowed: vec!["GET".to_string()]
            }
        );
    }

    #[test]
    fn backtracks_from_static_dead_end() {
        let mut router = Router::new();
        insert(&mut router, "/users/me/settings", "GET", 0);
        insert(&mut router, "/users/{id}/profile", "GET", 1);

        let (index, params) = found(&router, "/users/me/profile", "GET");
        assert_eq!(index, 1);
        assert_eq!(params, vec![("id".to_string(), "me".to_string())]);
    }

    #[test]
    fn param_names_are_per_template() {
        let mut router = Router::new();
        insert(&mut router, "/items/{itemId}", "GET", 0);
        insert(&mut router, "/items/{sku}", "DELETE", 1);

        assert_eq!(
            found(&router, "/items/7", "GET").1,
            vec![("itemId".to_string(), "7".to_string())]
        );
        assert_eq!(
            found(&router, "/items/7", "DELETE").1,
            vec![("sku".to_string(), "7".to_string())]
        );
    }

    #[test]
    fn first_declared_template_wins() {
        let mut router = Router::new();
        assert!(insert(&mut router, "/items/{a}", "GET", 0));
        assert!(!insert(&mut router, "/items/{b}", "GET", 1));

        assert_eq!(
            found(&router, "/items/x", "GET"),
            (0, vec![("a".to_string(), "x".to_string())])
        );
    }

    #[test]
    fn route_root_path() {
        let mut router = Router::new();
        insert(&mut router, "/", "GET", 0);

        assert_eq!(found(&router, "/", "GET").0, 0);
    }

    #[test]
    fn route_normalizes_request_path() {
        let mut router = Router::new();
        insert(&mut router, "/users/{id}", "get", 0);

        assert_eq!(
            found(&router, "/users//456/", "GET").1,
            vec![("id".to_string(), "456".to_string())]
        );
    }
}
