//! Math Rally Library
//!
//! An arcade racing simulation where cars lap a closed-loop track while a
//! reward-driven velocity controller, lane-change mechanics, bot drivers and
//! collision resolution play out each fixed timestep. The simulation runs
//! headless; any rendering layer sits on top of the `race` module's API.

pub mod race;
