use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Rewrite a SIE4 export in canonical form, sealed with #KSUMMA.
    let path = std::env::args()
        .nth(1)
        .ok_or("usage: roundtrip <file.se>")?;
    let doc = libsie4::parse_file(Path::new(&path))?;
    libsie4::validate_export(&doc)?;
    print!("{}", libsie4::write(&doc, true)?);
    Ok(())
}
