/// Elements with a width (eg. in local variables or on the operand stack)
///
/// JVM `long` and `double` values take up two slots while everything else takes up one.
pub trait Width {
    fn width(&self) -> usize;
}
