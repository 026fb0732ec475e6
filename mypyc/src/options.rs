/// The few genuinely runtime-chosen knobs a driver picks per compilation
/// (§10): everything else about how a unit compiles follows directly
/// from its source, so there is no broader configuration surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Whether a class whose primary base is declared outside the unit
    /// may still compile, downgraded to a non-native class that falls
    /// back to the CPython API at module load (§4.4, §8 scenario 6).
    /// When `false`, such a class is a hard error instead.
    pub allow_interpreted_subclass_fallback: bool,
    /// Whether downgrading a class to non-native is itself promoted
    /// from a warning to a fatal-to-class error.
    pub non_native_downgrade_is_fatal: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            allow_interpreted_subclass_fallback: true,
            non_native_downgrade_is_fatal: false,
        }
    }
}
