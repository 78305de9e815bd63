//! Strata Core - a multi-cursor text document engine.
//!
//! Text is stored as a list of line-aligned buffers so that edits, line
//! lookups and syntax highlighting touch only the chunks they need. A
//! [`Document`] is shared by any number of [`View`]s, each with its own
//! cursors, and every edit is recorded for undo and redo.
//!
//! This crate has no dependencies on windowing or rendering systems; text
//! measurement and highlighting are injected through [`TextMeasure`] and
//! [`Highlighter`].

pub mod buffer;
pub mod cursor;
pub mod document;
pub mod error;
pub mod history;
pub mod loader;
pub mod measure;
pub mod options;
pub mod perf;
pub mod scheduler;
pub mod search;
pub mod syntax;
pub mod text;
pub mod view;

pub use buffer::Buffer;
pub use cursor::{CursorRange, Direction, Granularity, Position, TextRange};
pub use document::{Document, DocumentBuilder, DocumentState, ViewId};
pub use error::{HighlightError, LoadError, SearchError, SettingsError};
pub use history::{Delta, History};
pub use loader::LineEnding;
pub use measure::{MonospaceMeasure, TextMeasure};
pub use options::{DocumentOptions, Indentation};
pub use perf::{DocumentPerf, RollingStats};
pub use scheduler::Scheduler;
pub use search::{MatchOptions, Matcher, RegexMatcher, Search};
pub use syntax::{Highlighter, KeywordHighlighter, Language, LineTokens, ParserState, Token, TokenStyle};
pub use text::{BufferId, BufferList, TextPosition};
pub use view::{ScrollOffset, View, ViewSettings};
