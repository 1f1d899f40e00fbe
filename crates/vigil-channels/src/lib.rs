/// Human confirmation channels for the Vigil approval workflow.
///
/// Each channel implements the `HumanConfirmation` trait:
/// - **Confirmation**: reviewer-facing prompt rendering shared by text channels
/// - **Console**: line-oriented async reader/writer (stdin/stdout in the CLI)
/// - **Scripted**: canned replies for non-interactive runs
pub mod confirmation;
pub mod console;
pub mod scripted;

pub use confirmation::render_prompt;
pub use console::ConsoleConfirmation;
pub use scripted::ScriptedConfirmation;
