pub mod container;
pub mod element;
pub mod event;
pub mod rule;

pub use container::{Container, ExtensionConfig};
pub use element::Element;
pub use event::{EventMeta, RuleRef, SharedEvent, SyntheticEvent};
pub use rule::{LogicType, Rule, RuleComponent};
