//! Auto-hold for layered key-event pipelines.
//!
//! An auto-hold binding wraps another action. Pressing it presses the wrapped
//! action; keeping it down past a timeout latches it, so it stays active
//! after the key comes up until the next unrelated key press or until the
//! same binding is pressed again.
//!
//! [`pipeline::Pipeline`] ties the pieces together: a [`keymap::Keymap`]
//! resolves positions to bindings, [`auto_hold::AutoHold`] instances live in
//! a [`registry::Registry`], built-in [`actions::Actions`] perform the
//! wrapped side effects, and a [`listener::ReleaseListener`] watches every
//! key activation.

pub mod actions;
pub mod auto_hold;
pub mod behavior;
pub mod binding;
pub mod config;
pub mod ipc;
pub mod keycodes;
pub mod keymap;
pub mod listener;
pub mod pipeline;
pub mod registry;
pub mod timer;

#[cfg(test)]
mod test_support;
