// Each test binary drives a different subset of the fixture.
#[allow(dead_code)]
pub mod fixture;
