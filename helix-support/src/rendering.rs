//! Text rendering for diagnostics.
//!
//! Container and router errors print resolution chains and
//! "did you mean?" candidates. The helpers here keep that output
//! consistent between crates.

/// Joins a resolution chain with arrows.
///
/// # Examples
/// ```
/// use helix_support::rendering::render_chain;
///
/// let chain = vec!["kernel", "router", "routes", "kernel"];
/// assert_eq!(render_chain(&chain), "kernel → router → routes → kernel");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Renders a comma separated list, e.g. for `Allow:` headers.
///
/// ```
/// use helix_support::rendering::render_list;
///
/// assert_eq!(render_list(&["GET", "HEAD"]), "GET, HEAD");
/// let none: [&str; 0] = [];
/// assert_eq!(render_list(&none), "");
/// ```
pub fn render_list(items: &[impl AsRef<str>]) -> String {
    items
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Strips module paths from a Rust type name.
///
/// Service ids created from types carry the full path; error output is
/// easier to scan with the short form.
///
/// ```
/// use helix_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("app::http::Kernel"), "Kernel");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn app::http::Controller>"),
///     "Arc<dyn Controller>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut chars = full_name.chars().peekable();
    let mut segment = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' => {
                result.push_str(&segment);
                result.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    result.push_str(&segment);
    result
}

/// Classic Levenshtein distance over chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            current[j + 1] = (previous[j] + cost)
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}

/// Picks the registered names closest to `requested`.
///
/// Substring hits rank first, then short-name hits, then names within an
/// edit distance of a third of the requested length.
///
/// ```
/// use helix_support::rendering::suggest_similar;
///
/// let known = ["user.show", "user.store", "post.show"];
/// let hits = suggest_similar("user.shw", &known, 2);
/// assert_eq!(hits[0], "user.show");
/// ```
pub fn suggest_similar(
    requested: &str,
    available: &[impl AsRef<str>],
    max_suggestions: usize,
) -> Vec<String> {
    if requested.is_empty() {
        return Vec::new();
    }

    let requested_lower = requested.to_lowercase();
    let requested_short = shorten_type_name(requested).to_lowercase();
    let budget = (requested_short.chars().count() / 3).max(1);

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .map(|name| name.as_ref())
        .filter(|name| *name != requested)
        .filter_map(|name| {
            let name_lower = name.to_lowercase();
            let name_short = shorten_type_name(name).to_lowercase();

            if name_lower.contains(&requested_lower) || requested_lower.contains(&name_lower) {
                return Some((name, 1000));
            }

            if name_short == requested_short {
                return Some((name, 900));
            }

            let distance = edit_distance(&name_short, &requested_short);
            (distance <= budget).then(|| (name, 500 - distance.min(500)))
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}
