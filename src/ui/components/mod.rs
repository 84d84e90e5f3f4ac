mod command_input;
mod form;
mod input;
mod key_result;
mod notice;
mod search_input;

pub use command_input::{CommandEvent, CommandInput};
pub use form::{FormEvent, FormPanel};
pub use input::{InputResult, TextInput};
pub use key_result::KeyResult;
pub use notice::Notice;
pub use search_input::{SearchEvent, SearchInput};
