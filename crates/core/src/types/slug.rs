//! URL slugs for products and categories.

/// Build a URL slug from a display name.
///
/// Lowercases ASCII letters, drops punctuation, and collapses runs of
/// whitespace, hyphens and underscores into a single hyphen.
///
/// ```
/// use shoppingify_core::slugify;
///
/// assert_eq!(slugify("Men's Running Shoes"), "mens-running-shoes");
/// assert_eq!(slugify("  --Hello,   World!--  "), "hello-world");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("iPhone 9"), "iphone-9");
        assert_eq!(slugify("snake_case_name"), "snake-case-name");
        assert_eq!(slugify("Café Crème"), "caf-crme");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify("a - b"), "a-b");
    }
}
