//! Terminal front-end: menu text and selection parsing.

pub mod menu;
