pub mod abb_robot_hal;
pub mod serial_gripper_link;
