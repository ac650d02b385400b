//! End-to-end pipeline scenarios driven through in-process fakes.

#[cfg(test)]
mod pipeline;
