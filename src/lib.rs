pub mod config;
pub mod coordinate_mapper;
pub mod geometry;
pub mod gripper_hal;
pub mod gripper_hal_factory;
pub mod intent;
pub mod perception;
pub mod pick_cycle;
pub mod pick_orchestrator;
pub mod robot_hal;
pub mod robot_hal_factory;
pub mod robot_hal_mock;
pub mod safety_clamp;
pub mod scripted_scene;

mod hw;
