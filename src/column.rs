/// Convert a zero-based column index to its spreadsheet letters
///
/// Uses the bijective base-26 scheme spreadsheets use for column names:
/// there is no zero digit, so after `Z` comes `AA` rather than `BA`.
///
/// # Examples
/// ```
/// use fpm::column::col_to_letter;
///
/// assert_eq!(col_to_letter(0), "A");
/// assert_eq!(col_to_letter(25), "Z");
/// assert_eq!(col_to_letter(26), "AA");
/// assert_eq!(col_to_letter(701), "ZZ");
/// ```
pub fn col_to_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut result = String::new();
    while n > 0 {
        n -= 1;
        result.push((b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    result.chars().rev().collect()
}

/// Convert spreadsheet letters back to a zero-based column index
///
/// Accepts upper or lower case. Returns `None` for an empty string or any
/// non-alphabetic character.
pub fn letter_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let n = letters.chars().try_fold(0usize, |acc, c| {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })?;
    Some(n - 1)
}

/// Parse a cell name such as `AB12` into a zero-based column and a
/// 1-based row
pub fn parse_cell_name(cell_name: &str) -> Option<(usize, usize)> {
    let split = cell_name.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell_name.split_at(split);
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let col = letter_to_col(letters)?;
    let row = digits.parse::<usize>().ok()?;
    if row == 0 {
        return None;
    }
    Some((col, row))
}

/// Split an A1 range into its sheet name and the part after `!`
///
/// Quoted sheet names are unquoted. A range without `!` names a whole sheet.
pub fn split_range(range: &str) -> (String, Option<&str>) {
    let (sheet, rest) = match range.rfind('!') {
        Some(pos) => (&range[..pos], Some(&range[pos + 1..])),
        None => (range, None),
    };

    let sheet = match sheet.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        Some(inner) => inner.replace("''", "'"),
        None => sheet.to_string(),
    };
    (sheet, rest)
}

/// Find the position of `name` in a header row
///
/// Matching is exact, like a lookup by column name in the sheet itself.
pub fn resolve<S: AsRef<str>>(headers: &[S], name: &str) -> Option<usize> {
    headers.iter().position(|h| h.as_ref() == name)
}

/// Build a sheet-qualified single-cell reference such as `Results!B2`
///
/// Sheet names containing anything other than ASCII alphanumerics or `_`
/// are wrapped in single quotes, with embedded quotes doubled.
pub fn cell_reference(sheet_name: &str, col: usize, row: usize) -> String {
    format!("{}!{}{}", quote_sheet_name(sheet_name), col_to_letter(col), row)
}

pub fn quote_sheet_name(sheet_name: &str) -> String {
    let plain = !sheet_name.is_empty()
        && sheet_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        sheet_name.to_string()
    } else {
        format!("'{}'", sheet_name.replace('\'', "''"))
    }
}
