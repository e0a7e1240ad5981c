// Copyright (c) The Diem Core Contributors
// Copyright (c) The Move Contributors
// SPDX-License-Identifier: Apache-2.0

//! Declaration model for contribution merging: scanning of declaration sources into an
//! immutable [`DeclarationEnv`].

pub mod ast;
pub mod diagnostics;
pub mod index;
pub mod lexer;
pub mod model;
pub mod parser;

pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use index::scan;
pub use model::DeclarationEnv;
