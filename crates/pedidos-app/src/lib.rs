// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod backend;
pub mod draft;
pub mod forms;
pub mod ids;
pub mod model;
pub mod roles;
pub mod search;
pub mod selection;
pub mod state;
pub mod steps;

pub use backend::*;
pub use draft::*;
pub use forms::*;
pub use ids::*;
pub use model::*;
pub use roles::*;
pub use search::*;
pub use selection::*;
pub use state::*;
pub use steps::*;
