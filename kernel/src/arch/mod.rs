//! Architecture support.
//!
//! TerminalOS targets one architecture only — 32-bit protected-mode x86
//! (spec.md §1 fixes the target; there is no SMP/other-arch non-goal to
//! hedge against) — so, unlike the teacher's `arch::{x86_64,aarch64,
//! riscv64}` split, there is a single `x86` submodule. It compiles for both
//! the bare-metal target and the host (`cargo test` links it in like any
//! other module); only the privileged instructions behind `port::hlt` and
//! friends are unsafe to actually execute outside ring 0, so host-side
//! tests exercise pure logic (`fs`, `rtc`, `keyboard`, `terminal`,
//! `rtc_hw::rate_for_frequency`) and never call those paths.
pub mod x86;
