//! Priority-ordered selector lists for the landmark regions.
//!
//! Semantic landmarks come first, then progressively more generic class and
//! id fallbacks. Order is load-bearing: the first visible match wins.

pub const HEADER_SELECTORS: &[&str] = &[
    "header",
    "[role=\"banner\"]",
    "nav",
    ".header",
    ".navbar",
    "#header",
    ".site-header",
    ".main-header",
    ".top-bar",
];

pub const FOOTER_SELECTORS: &[&str] = &[
    "footer",
    "[role=\"contentinfo\"]",
    ".footer",
    "#footer",
    ".site-footer",
    ".main-footer",
    ".bottom-bar",
];
