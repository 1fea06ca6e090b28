//! Generated protobuf types and service stubs for `authgate.v1`

#![allow(clippy::all)]

tonic::include_proto!("authgate.v1");
