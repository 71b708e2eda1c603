/// Loader and README generation
///
/// Three text artifacts accompany a protection run:
///
/// - the fxmanifest snippet returned with the run (`manifest_loader`)
/// - the standalone `phacprotect_loader_<id>.lua` placed in the archive
/// - `README.txt` with installation steps

/// Version written into loaders
pub const LOADER_VERSION: &str = "2.0";

/// Archive entry name of the standalone loader
pub fn loader_filename(encryption_id: &str) -> String {
    format!("phacprotect_loader_{}.lua", encryption_id)
}

/// fxmanifest snippet listing the run's Lua files
pub fn manifest_loader(encryption_id: &str, lua_files: &[&str]) -> String {
    let scripts = lua_files
        .iter()
        .map(|name| format!("client_script '{}'", name))
        .collect::<Vec<_>>()
        .join("\n");

    let checks = lua_files
        .iter()
        .map(|name| {
            format!(
                "\n-- Verify integrity of {name}\n\
                 if not _PHAC_PROTECTED then\n  \
                 print('[PHAC] Security check failed for {name}')\n  \
                 return\n\
                 end"
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "-- PHAC Loader Code for fxmanifest.lua\n\
         -- Encryption ID: {encryption_id}\n\
         -- Add this to your fxmanifest.lua\n\
         \n\
         fx_version 'cerulean'\n\
         game 'gta5'\n\
         \n\
         -- Load protected scripts\n\
         {scripts}\n\
         \n\
         -- PHAC Protection Layer\n\
         {checks}\n"
    )
}

/// Standalone loader shipped in the archive
pub fn standalone_loader(encryption_id: &str, license_key: &str, file_names: &[&str]) -> String {
    let manifest_lines = file_names
        .iter()
        .map(|name| format!("-- client_script '{}'", name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"-- ============================================
-- PHAC PROTECT LOADER v{version}
-- Encryption ID: {encryption_id}
-- License Key: {license_key}
-- Protected Files: {count}
-- ============================================

-- PHAC Protection Verification Layer
local _PHAC_PROTECTED = true
local _PHAC_VERSION = "{version}"
local _PHAC_ENC_ID = "{encryption_id}"
local _PHAC_LICENSE = "{license_key}"

-- Integrity check function
local function verifyIntegrity()
    if not _PHAC_PROTECTED then
        print("[PHAC] ^1SECURITY VIOLATION: Protection layer compromised^0")
        return false
    end

    if not _PHAC_LICENSE or _PHAC_LICENSE == "" then
        print("[PHAC] ^1SECURITY VIOLATION: Invalid license key^0")
        return false
    end

    print("[PHAC] ^2Protection Active - Encryption ID: " .. _PHAC_ENC_ID .. "^0")
    return true
end

-- Verify integrity on startup
if not verifyIntegrity() then
    print("[PHAC] ^1CRITICAL: Script protection failed. Execution halted.^0")
    return
end

-- Add this loader code to your fxmanifest.lua:
--
-- fx_version 'cerulean'
-- game 'gta5'
--
-- -- Load the PHAC Loader first
-- client_script '{loader}'
--
-- -- Then load your protected scripts
{manifest_lines}

print("[PHAC] ^2Protection System Loaded Successfully^0")
"#,
        version = LOADER_VERSION,
        count = file_names.len(),
        loader = loader_filename(encryption_id),
    )
}

/// Installation instructions shipped as `README.txt`
pub fn readme(encryption_id: &str, license_key: &str, file_names: &[&str]) -> String {
    let script_lines = file_names
        .iter()
        .map(|name| format!("   client_script '{}'", name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"PHAC PROTECT - INSTALLATION INSTRUCTIONS
========================================

Encryption ID: {encryption_id}
License Key: {license_key}
Protected Files: {count}

INSTALLATION STEPS:
-------------------

1. BACKUP: Back up your original files before continuing.

2. REPLACE FILES:
   - Delete the original .lua files from your resource
   - Extract ALL files from this ZIP into the resource folder

3. UPDATE fxmanifest.lua (or __resource.lua):
   - Open your resource's manifest file
   - ADD at the top (before any other script):

   client_script '{loader}'

   - Then point the protected script entries at their original names:
{script_lines}

4. RESTART THE RESOURCE:
   - In the server console: restart [resource-name]

5. VERIFY:
   - Check the server console
   - You should see: "[PHAC] Protection System Loaded Successfully"

IMPORTANT:
----------
- DO NOT modify the protected files or the loader
- DO NOT share your license key
- If you revoke the key, the scripts will stop working

SUPPORT:
--------
For questions or problems, open the PhacProtect dashboard.

(c) PHAC Security System - All rights reserved.
"#,
        count = file_names.len(),
        loader = loader_filename(encryption_id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_filename() {
        assert_eq!(loader_filename("ABC-1234"), "phacprotect_loader_ABC-1234.lua");
    }

    #[test]
    fn test_manifest_loader_lists_every_lua_file() {
        let loader = manifest_loader("M0X-AB12", &["client.lua", "server.lua"]);

        assert!(loader.starts_with("-- PHAC Loader Code for fxmanifest.lua\n-- Encryption ID: M0X-AB12\n"));
        assert!(loader.contains("fx_version 'cerulean'\ngame 'gta5'\n"));
        assert!(loader.contains("client_script 'client.lua'\nclient_script 'server.lua'\n"));
        assert!(loader.contains("-- Verify integrity of server.lua\nif not _PHAC_PROTECTED then\n"));
        assert!(loader.contains("print('[PHAC] Security check failed for client.lua')"));
        assert!(loader.ends_with("end\n"));
    }

    #[test]
    fn test_standalone_loader_embeds_run_details() {
        let loader = standalone_loader("M0X-AB12", "phac_key", &["a.lua", "b.lua"]);

        assert!(loader.contains("-- PHAC PROTECT LOADER v2.0"));
        assert!(loader.contains("-- License Key: phac_key"));
        assert!(loader.contains("-- Protected Files: 2"));
        assert!(loader.contains("local _PHAC_ENC_ID = \"M0X-AB12\""));
        assert!(loader.contains("local function verifyIntegrity()"));
        assert!(loader.contains("-- client_script 'phacprotect_loader_M0X-AB12.lua'"));
        assert!(loader.contains("-- client_script 'a.lua'\n-- client_script 'b.lua'"));
    }

    #[test]
    fn test_readme_lists_files() {
        let text = readme("M0X-AB12", "phac_key", &["a.lua"]);

        assert!(text.starts_with("PHAC PROTECT - INSTALLATION INSTRUCTIONS"));
        assert!(text.contains("Protected Files: 1"));
        assert!(text.contains("   client_script 'phacprotect_loader_M0X-AB12.lua'"));
        assert!(text.contains("   client_script 'a.lua'"));
    }
}
