pub mod coord_tree;
pub mod publish_action;
