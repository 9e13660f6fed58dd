pub mod buffer;
pub mod editor;
pub mod metrics;
pub mod paste;
pub mod source;

pub use buffer::{Feed, InputBuffer, InputMode, BLOCK_MARKER};
pub use editor::{
    apply_editor_key_event, edit_in_external_editor, lock_surface, new_surface, EditLine,
    EditSurface, EditorAction, LineEditor, TerminalEditor,
};
pub use paste::{frame_paste, Observed, PasteAccumulator, PASTE_END, PASTE_START};
pub use source::{ChannelSource, InputPump, LineSource, RawInput, ReaderSource};
