/// Activation code generation
use rand::{rngs::OsRng, Rng};

/// Symbols an activation code is drawn from
pub const ACTIVATION_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ\
                                             abcdefghijklmnopqrstuvwxyz\
                                             0123456789";

/// Length of every activation code
pub const ACTIVATION_CODE_LENGTH: usize = 6;

/// Draw `length` characters uniformly from the 62-symbol alphabet using the OS CSPRNG.
///
/// Uniqueness is not checked; collisions are left to the size of the code space.
pub fn generate_activation_code(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..ACTIVATION_CODE_CHARSET.len());
            ACTIVATION_CODE_CHARSET[idx] as char
        })
        .collect()
}
