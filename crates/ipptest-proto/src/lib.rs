// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ipptest-proto: IPP message model, wire codec, attribute validation and
// the HTTP transport used to reach the printer under test.

pub mod codec;
pub mod message;
pub mod tags;
pub mod transport;
pub mod uri;
pub mod validate;

pub use codec::{Decoded, decode, encode};
pub use message::{Attribute, IppValue, Message, MessageBuilder, Resolution};
pub use tags::{GroupTag, ValueTag};
pub use transport::{Exchange, HttpTransport, MockTransport, Request, Transport};
pub use uri::{UriParts, uris_equal};
pub use validate::validate_attribute;
