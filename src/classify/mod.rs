//! 分类层：外部意图分类器抽象与 Mock 实现

pub mod mock;
pub mod traits;

pub use mock::{FailingClassifier, MockClassifier};
pub use traits::{ClassifierError, IntentClassifier};
