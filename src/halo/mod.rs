//! The asynchronous neighbour-exchange protocol.
//!
//! Three engines share one discipline: never block on a transport
//! completion without pumping the [`answer::AnswerEngine`] in between.
//! [`ask::AskSet`] poses boundary questions and drains their replies,
//! [`answer::AnswerEngine`] services the neighbours' questions, and
//! [`finish::FinishExchange`] runs the symmetric termination handshake.

pub mod answer;
pub mod ask;
pub mod finish;
pub mod wire;

pub use answer::AnswerEngine;
pub use ask::AskSet;
pub use finish::FinishExchange;
