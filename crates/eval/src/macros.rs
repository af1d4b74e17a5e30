/// Compile a literal pattern once and hand back a `&'static Regex`.
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).expect("literal pattern"));
        &*RE
    }};
}
