mod fake_ssh;
mod lifecycle;

pub use fake_ssh::FakeSsh;
