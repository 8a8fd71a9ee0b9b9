// Copyright (c) Consensus Storage Authors
// SPDX-License-Identifier: Apache-2.0

mod parameters;

pub use parameters::*;
