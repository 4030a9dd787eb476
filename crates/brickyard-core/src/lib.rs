//! Brickyard Core Types and Operations
//!
//! This crate provides the document model of the Brickyard LDraw editor. It
//! includes:
//!
//! - **Geometry**: Transforms, decomposition and bounding boxes ([`geometry`] module)
//! - **Colors**: LDraw color codes and display colors ([`color::ColorCode`], [`color::Color`])
//! - **Directives**: The directive payloads ([`directive`] module)
//! - **Tree**: The arena-backed directive tree ([`tree::DirectiveTree`])
//! - **Edits**: Reversible edit commands ([`edit::Edit`])
//! - **LSynth**: Constraint blocks and part synthesis ([`lsynth`] module)
//! - **Reports**: Piece counts and dimensions ([`report`] module)
//!
//! The core performs no I/O. Parts are looked up through the
//! [`part_library::PartLibrary`] trait supplied by the caller.

pub mod color;
pub mod directive;
pub mod edit;
pub mod geometry;
pub mod lsynth;
pub mod part_library;
pub mod report;
pub mod serialize;
pub mod tree;
