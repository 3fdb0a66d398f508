//! Unconditional console output macros, for boot banners and the
//! diagnostic shell. Use the `log` facade (`log::info!` etc.) for leveled
//! diagnostic messages instead.

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::serial::_print(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}
