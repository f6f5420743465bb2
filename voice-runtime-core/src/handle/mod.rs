pub mod native_handle;
