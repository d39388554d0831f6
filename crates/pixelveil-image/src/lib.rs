// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pixelveil-image: pixel-level operations for the sensitive-region pipeline.
//
// Provides the region codec (exact extraction and restoration of RGBA blocks),
// the mask renderer (pixelation / blur over a rectangle), and decode/encode
// helpers for getting images in and out of memory.

pub mod codec;
pub mod io;
pub mod mask;

pub use codec::{Extracted, RegionCodec};
pub use io::{decode_rgba, encode_png, load_rgba, save_png};
pub use mask::apply_mask;
