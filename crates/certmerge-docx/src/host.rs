//! Host-driven fallback builder.
//!
//! Drives a LibreOffice process with a generated StarBasic macro that
//! opens the template, replaces every mapped marker across the body text,
//! text frames, and every in-use page style's headers and footers, then
//! stores the result as DOCX. The macro is injected through a throwaway
//! user profile so nothing on the operator's machine is touched.
//!
//! This path exists for templates the in-process engine cannot crack (it
//! is only attempted after a zero-replacement outcome) and must never be
//! the primary strategy: it needs an external host binary and, being a
//! whole extra process, it is serialized so at most one attempt runs at a
//! time. With `interactive` set the host window stays visible for manual
//! inspection.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use certmerge_core::{CertMergeError, Journal, ReplacementMap, Result};

use crate::builder::{BuildOutcome, CertificateBuilder};

/// One interactive host process at a time.
static HOST_LOCK: Mutex<()> = Mutex::new(());

/// Fallback builder around a local LibreOffice installation.
#[derive(Debug, Clone, Default)]
pub struct HostBuilder {
    binary: Option<PathBuf>,
    interactive: bool,
}

impl HostBuilder {
    /// Probe PATH for a host binary.
    #[must_use]
    pub fn probe() -> Self {
        Self {
            binary: locate_host_binary(),
            interactive: false,
        }
    }

    /// Builder with a known binary (used by tests).
    #[must_use]
    pub fn with_binary(binary: PathBuf) -> Self {
        Self {
            binary: Some(binary),
            interactive: false,
        }
    }

    /// Keep the host window visible for manual inspection.
    #[must_use]
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }
}

impl CertificateBuilder for HostBuilder {
    fn name(&self) -> &'static str {
        "host"
    }

    fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    fn attempt(
        &self,
        template: &Path,
        map: &ReplacementMap,
        output: &Path,
        journal: &Journal,
    ) -> Result<BuildOutcome> {
        let Some(binary) = &self.binary else {
            return Err(CertMergeError::Build(
                "no document host binary on PATH".to_string(),
            ));
        };
        let _serialized = HOST_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        let profile = tempfile::tempdir().map_err(CertMergeError::Io)?;
        let result_path = profile.path().join("result.txt");
        seed_profile(
            profile.path(),
            &macro_source(template, output, &result_path, map)?,
        )?;

        journal.info(format!(
            "driving document host {} for {}",
            binary.display(),
            template.display()
        ));

        let mut command = Command::new(binary);
        if !self.interactive {
            command.arg("--headless");
        }
        let run = command
            .args(["--norestore", "--nologo", "--nolockcheck"])
            .arg(format!(
                "-env:UserInstallation={}",
                file_url(profile.path())
            ))
            .arg("vnd.sun.star.script:Standard.Module1.RunMerge?language=Basic&location=application")
            .output()
            .map_err(|e| CertMergeError::Build(format!("failed to launch host: {e}")))?;

        if !run.status.success() {
            return Err(CertMergeError::Build(format!(
                "host exited with {}: {}",
                run.status,
                String::from_utf8_lossy(&run.stderr).trim()
            )));
        }

        let replaced: usize = fs::read_to_string(&result_path)
            .ok()
            .and_then(|text| text.trim().parse().ok())
            .unwrap_or(0);
        if replaced == 0 {
            return Err(CertMergeError::NoReplacements);
        }
        if !output.is_file() {
            return Err(CertMergeError::Build(
                "host reported success but produced no output".to_string(),
            ));
        }
        Ok(BuildOutcome {
            regions_replaced: replaced,
            engine: self.name(),
        })
    }
}

/// Locate a LibreOffice binary on PATH.
fn locate_host_binary() -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    for dir in env::split_paths(&path) {
        for name in ["soffice", "libreoffice", "soffice.exe"] {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// file:// URL for a local path, as the host's loadComponentFromURL wants.
fn file_url(path: &Path) -> String {
    let mut text = path.to_string_lossy().replace('\\', "/");
    if !text.starts_with('/') {
        text.insert(0, '/');
    }
    format!("file://{text}")
}

/// Escape a literal for a StarBasic double-quoted string.
fn basic_string(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    format!("\"{}\"", cleaned.replace('"', "\"\""))
}

/// Generate the merge macro with the paths and map baked in.
fn macro_source(
    template: &Path,
    output: &Path,
    result_path: &Path,
    map: &ReplacementMap,
) -> Result<String> {
    if map.is_empty() {
        return Err(CertMergeError::NoReplacements);
    }
    let last = map.len() - 1;

    let mut assignments = String::new();
    for (index, (token, value)) in map.iter().enumerate() {
        assignments.push_str(&format!(
            "    aSearch({index}) = {} : aReplace({index}) = {}\n",
            basic_string(token),
            basic_string(value)
        ));
    }

    Ok(format!(
        r#"Sub RunMerge
    Dim oDesktop As Object, oDoc As Object, oReplace As Object
    Dim aSearch({last}) As String, aReplace({last}) As String
    Dim nTotal As Integer, i As Integer
{assignments}
    oDesktop = createUnoService("com.sun.star.frame.Desktop")
    Dim aArgs(0) As New com.sun.star.beans.PropertyValue
    aArgs(0).Name = "Hidden" : aArgs(0).Value = True
    oDoc = oDesktop.loadComponentFromURL({template_url}, "_blank", 0, aArgs())
    nTotal = 0
    For i = 0 To {last}
        oReplace = oDoc.createReplaceDescriptor()
        oReplace.SearchString = aSearch(i)
        oReplace.ReplaceString = aReplace(i)
        nTotal = nTotal + oDoc.replaceAll(oReplace)
    Next i
    nTotal = nTotal + ReplaceInFrames(oDoc, aSearch(), aReplace())
    nTotal = nTotal + ReplaceInPageStyles(oDoc, aSearch(), aReplace())
    Dim aSave(0) As New com.sun.star.beans.PropertyValue
    aSave(0).Name = "FilterName" : aSave(0).Value = "MS Word 2007 XML"
    oDoc.storeToURL({output_url}, aSave())
    oDoc.close(False)
    Dim iFile As Integer
    iFile = Freefile
    Open {result_url} For Output As #iFile
    Print #iFile, nTotal
    Close #iFile
End Sub

Function ReplaceInText(oText As Object, aSearch() As String, aReplace() As String) As Integer
    Dim sText As String, nHits As Integer, i As Integer
    sText = oText.getString()
    nHits = 0
    For i = LBound(aSearch()) To UBound(aSearch())
        If InStr(sText, aSearch(i)) > 0 Then
            sText = Join(Split(sText, aSearch(i)), aReplace(i))
            nHits = nHits + 1
        End If
    Next i
    If nHits > 0 Then oText.setString(sText)
    ReplaceInText = nHits
End Function

Function ReplaceInFrames(oDoc As Object, aSearch() As String, aReplace() As String) As Integer
    Dim nHits As Integer, j As Integer
    nHits = 0
    For j = 0 To oDoc.TextFrames.Count - 1
        nHits = nHits + ReplaceInText(oDoc.TextFrames.getByIndex(j).Text, aSearch(), aReplace())
    Next j
    ReplaceInFrames = nHits
End Function

Function ReplaceInPageStyles(oDoc As Object, aSearch() As String, aReplace() As String) As Integer
    Dim oStyles As Object, oStyle As Object
    Dim nHits As Integer, k As Integer
    nHits = 0
    oStyles = oDoc.StyleFamilies.getByName("PageStyles")
    For k = 0 To oStyles.Count - 1
        oStyle = oStyles.getByIndex(k)
        If oStyle.isInUse() Then
            If oStyle.HeaderIsOn Then
                nHits = nHits + ReplaceInText(oStyle.HeaderText, aSearch(), aReplace())
            End If
            If oStyle.FooterIsOn Then
                nHits = nHits + ReplaceInText(oStyle.FooterText, aSearch(), aReplace())
            End If
        End If
    Next k
    ReplaceInPageStyles = nHits
End Function
"#,
        template_url = basic_string(&file_url(template)),
        output_url = basic_string(&file_url(output)),
        result_url = basic_string(&result_path.to_string_lossy()),
    ))
}

/// Seed a throwaway user profile whose Standard basic library holds the
/// generated macro.
fn seed_profile(profile: &Path, module: &str) -> Result<()> {
    let basic_dir = profile.join("user/basic");
    let library_dir = basic_dir.join("Standard");
    fs::create_dir_all(&library_dir)?;

    fs::write(
        basic_dir.join("script.xlc"),
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE library:libraries PUBLIC "-//OpenOffice.org//DTD OfficeDocument 1.0//EN" "libraries.dtd">
<library:libraries xmlns:library="http://openoffice.org/2000/library" xmlns:xlink="http://www.w3.org/1999/xlink">
 <library:library library:name="Standard" xlink:href="$(USER)/basic/Standard/script.xlb/" xlink:type="simple" library:link="false"/>
</library:libraries>
"#,
    )?;
    fs::write(
        library_dir.join("script.xlb"),
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE library:library PUBLIC "-//OpenOffice.org//DTD OfficeDocument 1.0//EN" "library.dtd">
<library:library xmlns:library="http://openoffice.org/2000/library" library:name="Standard" library:readonly="false" library:passwordprotected="false">
 <library:element library:name="Module1"/>
</library:library>
"#,
    )?;

    let escaped = module
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    fs::write(
        library_dir.join("Module1.xba"),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE script:module PUBLIC "-//OpenOffice.org//DTD OfficeDocument 1.0//EN" "module.dtd">
<script:module xmlns:script="http://openoffice.org/2000/script" script:name="Module1" script:language="StarBasic">{escaped}</script:module>
"#
        ),
    )?;
    Ok(())
}
