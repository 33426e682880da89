pub mod cell;
pub mod entity;
pub mod geom;
pub mod kinematics;
pub mod physics;
