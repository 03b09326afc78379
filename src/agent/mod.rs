mod category;
mod classifier;
pub mod lexicon;
mod responder;
mod scheduler;
mod session;

pub use category::Category;
pub use classifier::{Classification, IntentClassifier};
pub use responder::ResponseSelector;
pub use scheduler::{Callback, ManualScheduler, ThreadScheduler, TurnScheduler};
pub use session::{Author, ConversationSession, SessionPhase, Turn};
