//! Detection, landmark estimation and tracking of human hands.
//!
//! Hands are found with a palm detector, which is only run while there are free track slots. Each
//! detection is grown into a hand-sized region of interest, which the landmark network then
//! refines. From then on the hand is tracked by deriving the next frame's region from the current
//! landmarks.

pub mod detection;
pub mod landmark;
pub mod tracking;
