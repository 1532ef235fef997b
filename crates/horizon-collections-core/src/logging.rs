//! Logging and debugging facilities for Horizon Collections.
//!
//! This module provides:
//! - Target names for filtering the `tracing` output of each subsystem
//! - Debug visualization for hierarchical data ([`TreeDebug`])
//! - Performance tracing hooks for profiling ([`PerfSpan`])
//!
//! # Tracing Integration
//!
//! Horizon Collections uses the `tracing` crate for instrumentation. To see
//! logs, install a subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_collections=debug")
//!     .init();
//! ```

/// `tracing` targets used across the workspace, for filter directives.
pub mod targets {
    /// Signal emission.
    pub const SIGNAL: &str = "horizon_collections_core::signal";
    /// Collection build target.
    pub const COLLECTION: &str = "horizon_collections::collection";
    /// Selection and expansion target.
    pub const SELECTION: &str = "horizon_collections::selection";
    /// Keyboard navigation target.
    pub const NAVIGATION: &str = "horizon_collections::navigation";
    /// Async list controller target.
    pub const ASYNC_LIST: &str = "horizon_collections::async_list";
    /// Performance spans target.
    pub const PERF: &str = "horizon_collections::perf";
}

/// Branch characters used by [`TreeDebug`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// `|`, `+--` and `` `-- ``.
    Ascii,
    /// Box-drawing characters.
    #[default]
    Unicode,
    /// Compact dash-prefixed representation.
    Compact,
}

/// Layout of [`TreeDebug`] output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// Branch characters.
    pub style: TreeStyle,
    /// Deepest level printed; `None` prints everything.
    pub max_depth: Option<usize>,
    /// Spaces per nesting level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Options using plain ASCII branches.
    pub fn ascii() -> Self {
        Self {
            style: TreeStyle::Ascii,
            ..Default::default()
        }
    }
}

/// A hierarchy that can be rendered by [`TreeDebug`].
pub trait DebugTree {
    /// Node identifier.
    type Id: Clone;

    /// Title line printed above the tree.
    fn heading(&self) -> String;

    /// Top-level nodes in order.
    fn roots(&self) -> Vec<Self::Id>;

    /// Children of a node in order.
    fn children(&self, id: &Self::Id) -> Vec<Self::Id>;

    /// The text printed for a node.
    fn label(&self, id: &Self::Id) -> String;
}

/// Renders a [`DebugTree`] as indented text, one node per line.
#[derive(Debug, Clone, Default)]
pub struct TreeDebug {
    options: TreeFormatOptions,
}

impl TreeDebug {
    /// A renderer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// A renderer with the given options.
    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Format the whole tree.
    pub fn format<T: DebugTree + ?Sized>(&self, tree: &T) -> String {
        let mut output = tree.heading();
        output.push('\n');

        let roots = tree.roots();
        if roots.is_empty() {
            output.push_str("  (empty)\n");
        } else {
            let count = roots.len();
            for (i, root) in roots.into_iter().enumerate() {
                self.format_subtree_into(tree, &root, 0, i + 1 == count, &mut output);
            }
        }
        output
    }

    fn format_subtree_into<T: DebugTree + ?Sized>(
        &self,
        tree: &T,
        id: &T::Id,
        depth: usize,
        is_last: bool,
        output: &mut String,
    ) {
        if self.options.max_depth.is_some_and(|max| depth > max) {
            return;
        }

        output.push_str(&self.build_prefix(depth, is_last));
        output.push_str(&tree.label(id));
        output.push('\n');

        let children = tree.children(id);
        if let Some((last, rest)) = children.split_last() {
            for child in rest {
                self.format_subtree_into(tree, child, depth + 1, false, output);
            }
            self.format_subtree_into(tree, last, depth + 1, true, output);
        }
    }

    fn build_prefix(&self, depth: usize, is_last: bool) -> String {
        let (branch, corner, last) = match self.options.style {
            TreeStyle::Ascii => ("|", "+--", "`--"),
            TreeStyle::Unicode => (
                "\u{2502}",
                "\u{251c}\u{2500}\u{2500}",
                "\u{2514}\u{2500}\u{2500}",
            ),
            TreeStyle::Compact => ("", "-", "-"),
        };

        let indent = " ".repeat(self.options.indent_size);
        let mut prefix = format!("{branch}{indent}").repeat(depth);
        prefix.push_str(if is_last { last } else { corner });
        prefix.push(' ');
        prefix
    }
}

/// Keeps an `info` span on the `horizon_collections::perf` target entered
/// until dropped, so subscribers can time the enclosed work.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Enters a span for `name`.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: targets::PERF, "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}
