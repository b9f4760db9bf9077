//! Macros building option structs from `Default` plus field assignments, so that
//! call sites keep compiling when fields are added.

/// Construct [`crate::Options`].
///
/// ```rust
/// use convert_yaml::options::{DocumentPolicy, UnknownTagPolicy};
///
/// let options = convert_yaml::options! {
///     documents: DocumentPolicy::Single,
///     unknown_tags: UnknownTagPolicy::Ignore,
/// };
/// assert_eq!(options.documents, DocumentPolicy::Single);
/// ```
#[macro_export]
macro_rules! options {
    ( $( $field:ident : $value:expr ),* $(,)? ) => {{
        let mut opt = $crate::Options::default();
        $(
            opt.$field = $value;
        )*
        opt
    }};
}

/// Construct [`crate::JsonOptions`].
///
/// ```rust
/// let json = convert_yaml::json_options! { indent: None };
/// assert_eq!(convert_yaml::encode(&serde_json::json!({"a": [1]}), &json).unwrap(), r#"{"a":[1]}"#);
/// ```
#[macro_export]
macro_rules! json_options {
    ( $( $field:ident : $value:expr ),* $(,)? ) => {{
        let mut opt = $crate::JsonOptions::default();
        $(
            opt.$field = $value;
        )*
        opt
    }};
}

/// Construct [`crate::Budget`].
///
/// ```rust
/// let budget = convert_yaml::budget! { max_aliases: 10, max_depth: 8 };
/// assert_eq!(budget.max_aliases, 10);
/// ```
#[macro_export]
macro_rules! budget {
    ( $( $field:ident : $value:expr ),* $(,)? ) => {{
        let mut b = $crate::Budget::default();
        $(
            b.$field = $value;
        )*
        b
    }};
}
