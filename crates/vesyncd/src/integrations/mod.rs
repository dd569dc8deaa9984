pub mod vesync;
