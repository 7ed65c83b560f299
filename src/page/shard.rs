use std::path::PathBuf;

/// Computes the archive-relative directory of a page
///
/// The page directory sits two levels down: first under its lower-cased first
/// character, then under its lower-cased second character (the first character again
/// for one-character names). The fan-out only bounds directory sizes; it carries no
/// meaning.
///
/// # Examples
///
/// ```
/// use history_mirror::page::shard_path;
/// use std::path::PathBuf;
///
/// assert_eq!(shard_path("a"), PathBuf::from("a/a/a"));
/// assert_eq!(shard_path("ab"), PathBuf::from("a/b/ab"));
/// assert_eq!(shard_path("abc"), PathBuf::from("a/b/abc"));
/// ```
pub fn shard_path(name: &str) -> PathBuf {
    let mut chars = name.chars();
    let first = chars.next().unwrap_or('_');
    let second = chars.next().unwrap_or(first);

    let mut path = PathBuf::new();
    path.push(shard_component(first));
    path.push(shard_component(second));
    path.push(name);
    path
}

fn shard_component(c: char) -> String {
    c.to_lowercase().collect()
}
