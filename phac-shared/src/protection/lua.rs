/// Lua transform
///
/// Every protected Lua file starts with the PHAC header. Premium files carry
/// their source as a base64 payload; other levels rename the identifiers
/// declared with `function <name>` and `local <name>`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::Rng;
use regex::{Captures, Regex};

use super::{NameMapper, ProtectError, ProtectionLevel, BASE36};

/// Prefix of generated Lua identifiers
pub const LUA_NAME_PREFIX: &str = "_PHAC_";

/// Lua reserved words; never renamed
const LUA_KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
    "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// Header prepended to every protected Lua file
pub fn header(level: ProtectionLevel) -> String {
    format!(
        "-- Protected by PHAC Security System\n\
         -- Protection Level: {}\n\
         -- WARNING: Tampering with this file will result in execution failure\n\
         \n\
         local _PHAC_PROTECTED = true\n\
         local _PHAC_VERSION = \"2.0\"\n\
         \n",
        level.label()
    )
}

/// Protects a Lua source file
pub fn protect_lua<R: Rng + ?Sized>(
    content: &str,
    level: ProtectionLevel,
    rng: &mut R,
) -> Result<String, ProtectError> {
    let mut output = header(level);

    if level == ProtectionLevel::Premium {
        let payload = STANDARD.encode(content.as_bytes());
        output.push_str(&format!(
            "-- Bytecode Encrypted ({} bytes)\nloadstring(base64decode(\"{}\"))()",
            payload.len(),
            payload
        ));
        return Ok(output);
    }

    output.push_str(&rename_declarations(content, rng)?);
    Ok(output)
}

fn rename_declarations<R: Rng + ?Sized>(content: &str, rng: &mut R) -> Result<String, ProtectError> {
    let function_decl = Regex::new(r"function\s+(\w+)")?;
    let local_decl = Regex::new(r"local\s+(\w+)")?;

    let mut names = NameMapper::new(LUA_NAME_PREFIX, BASE36, 6);

    let renamed = function_decl.replace_all(content, |caps: &Captures| {
        let name = &caps[1];
        if LUA_KEYWORDS.contains(&name) {
            caps[0].to_string()
        } else {
            format!("function {}", names.rename(name, rng))
        }
    });

    let renamed = local_decl.replace_all(&renamed, |caps: &Captures| {
        let name = &caps[1];
        if LUA_KEYWORDS.contains(&name) {
            caps[0].to_string()
        } else {
            format!("local {}", names.rename(name, rng))
        }
    });

    Ok(renamed.into_owned())
}
