pub mod file {
    pub mod file_tree;
}
pub mod memory {
    pub mod mem_tree;
}
pub mod redis {
    pub mod redis_client;
    pub mod redis_tree;
}
pub mod tree_impl;
