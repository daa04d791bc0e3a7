//! Static ISO 3166-1 country table
//!
//! Used to fill in a country name and continent when the country record only
//! carries a code. The table is immutable for the life of the process; lookups
//! are a binary search over a slice sorted by code.

/// One country entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Country {
    /// ISO 3166-1 alpha-2 code, uppercase
    pub code: &'static str,
    /// English short name
    pub name: &'static str,
    /// Two-letter continent code (AF, AN, AS, EU, NA, OC, SA)
    pub continent: &'static str,
}

const fn country(code: &'static str, name: &'static str, continent: &'static str) -> Country {
    Country {
        code,
        name,
        continent,
    }
}

/// Sorted by code
static COUNTRIES: &[Country] = &[
    country("AD", "Andorra", "EU"),
    country("AE", "United Arab Emirates", "AS"),
    country("AF", "Afghanistan", "AS"),
    country("AG", "Antigua and Barbuda", "NA"),
    country("AI", "Anguilla", "NA"),
    country("AL", "Albania", "EU"),
    country("AM", "Armenia", "AS"),
    country("AO", "Angola", "AF"),
    country("AQ", "Antarctica", "AN"),
    country("AR", "Argentina", "SA"),
    country("AS", "American Samoa", "OC"),
    country("AT", "Austria", "EU"),
    country("AU", "Australia", "OC"),
    country("AW", "Aruba", "NA"),
    country("AX", "Åland Islands", "EU"),
    country("AZ", "Azerbaijan", "AS"),
    country("BA", "Bosnia and Herzegovina", "EU"),
    country("BB", "Barbados", "NA"),
    country("BD", "Bangladesh", "AS"),
    country("BE", "Belgium", "EU"),
    country("BF", "Burkina Faso", "AF"),
    country("BG", "Bulgaria", "EU"),
    country("BH", "Bahrain", "AS"),
    country("BI", "Burundi", "AF"),
    country("BJ", "Benin", "AF"),
    country("BL", "Saint Barthélemy", "NA"),
    country("BM", "Bermuda", "NA"),
    country("BN", "Brunei", "AS"),
    country("BO", "Bolivia", "SA"),
    country("BQ", "Bonaire, Sint Eustatius, and Saba", "NA"),
    country("BR", "Brazil", "SA"),
    country("BS", "Bahamas", "NA"),
    country("BT", "Bhutan", "AS"),
    country("BV", "Bouvet Island", "AN"),
    country("BW", "Botswana", "AF"),
    country("BY", "Belarus", "EU"),
    country("BZ", "Belize", "NA"),
    country("CA", "Canada", "NA"),
    country("CC", "Cocos (Keeling) Islands", "AS"),
    country("CD", "DR Congo", "AF"),
    country("CF", "Central African Republic", "AF"),
    country("CG", "Congo Republic", "AF"),
    country("CH", "Switzerland", "EU"),
    country("CI", "Ivory Coast", "AF"),
    country("CK", "Cook Islands", "OC"),
    country("CL", "Chile", "SA"),
    country("CM", "Cameroon", "AF"),
    country("CN", "China", "AS"),
    country("CO", "Colombia", "SA"),
    country("CR", "Costa Rica", "NA"),
    country("CU", "Cuba", "NA"),
    country("CV", "Cabo Verde", "AF"),
    country("CW", "Curaçao", "NA"),
    country("CX", "Christmas Island", "AS"),
    country("CY", "Cyprus", "EU"),
    country("CZ", "Czechia", "EU"),
    country("DE", "Germany", "EU"),
    country("DJ", "Djibouti", "AF"),
    country("DK", "Denmark", "EU"),
    country("DM", "Dominica", "NA"),
    country("DO", "Dominican Republic", "NA"),
    country("DZ", "Algeria", "AF"),
    country("EC", "Ecuador", "SA"),
    country("EE", "Estonia", "EU"),
    country("EG", "Egypt", "AF"),
    country("EH", "Western Sahara", "AF"),
    country("ER", "Eritrea", "AF"),
    country("ES", "Spain", "EU"),
    country("ET", "Ethiopia", "AF"),
    country("FI", "Finland", "EU"),
    country("FJ", "Fiji", "OC"),
    country("FK", "Falkland Islands", "SA"),
    country("FM", "Federated States of Micronesia", "OC"),
    country("FO", "Faroe Islands", "EU"),
    country("FR", "France", "EU"),
    country("GA", "Gabon", "AF"),
    country("GB", "United Kingdom", "EU"),
    country("GD", "Grenada", "NA"),
    country("GE", "Georgia", "AS"),
    country("GF", "French Guiana", "SA"),
    country("GG", "Guernsey", "EU"),
    country("GH", "Ghana", "AF"),
    country("GI", "Gibraltar", "EU"),
    country("GL", "Greenland", "NA"),
    country("GM", "Gambia", "AF"),
    country("GN", "Guinea", "AF"),
    country("GP", "Guadeloupe", "NA"),
    country("GQ", "Equatorial Guinea", "AF"),
    country("GR", "Greece", "EU"),
    country("GS", "South Georgia and the South Sandwich Islands", "AN"),
    country("GT", "Guatemala", "NA"),
    country("GU", "Guam", "OC"),
    country("GW", "Guinea-Bissau", "AF"),
    country("GY", "Guyana", "SA"),
    country("HK", "Hong Kong", "AS"),
    country("HM", "Heard and McDonald Islands", "AN"),
    country("HN", "Honduras", "NA"),
    country("HR", "Croatia", "EU"),
    country("HT", "Haiti", "NA"),
    country("HU", "Hungary", "EU"),
    country("ID", "Indonesia", "AS"),
    country("IE", "Ireland", "EU"),
    country("IL", "Israel", "AS"),
    country("IM", "Isle of Man", "EU"),
    country("IN", "India", "AS"),
    country("IO", "British Indian Ocean Territory", "AS"),
    country("IQ", "Iraq", "AS"),
    country("IR", "Iran", "AS"),
    country("IS", "Iceland", "EU"),
    country("IT", "Italy", "EU"),
    country("JE", "Jersey", "EU"),
    country("JM", "Jamaica", "NA"),
    country("JO", "Jordan", "AS"),
    country("JP", "Japan", "AS"),
    country("KE", "Kenya", "AF"),
    country("KG", "Kyrgyzstan", "AS"),
    country("KH", "Cambodia", "AS"),
    country("KI", "Kiribati", "OC"),
    country("KM", "Comoros", "AF"),
    country("KN", "St Kitts and Nevis", "NA"),
    country("KP", "North Korea", "AS"),
    country("KR", "South Korea", "AS"),
    country("KW", "Kuwait", "AS"),
    country("KY", "Cayman Islands", "NA"),
    country("KZ", "Kazakhstan", "AS"),
    country("LA", "Laos", "AS"),
    country("LB", "Lebanon", "AS"),
    country("LC", "Saint Lucia", "NA"),
    country("LI", "Liechtenstein", "EU"),
    country("LK", "Sri Lanka", "AS"),
    country("LR", "Liberia", "AF"),
    country("LS", "Lesotho", "AF"),
    country("LT", "Lithuania", "EU"),
    country("LU", "Luxembourg", "EU"),
    country("LV", "Latvia", "EU"),
    country("LY", "Libya", "AF"),
    country("MA", "Morocco", "AF"),
    country("MC", "Monaco", "EU"),
    country("MD", "Moldova", "EU"),
    country("ME", "Montenegro", "EU"),
    country("MF", "Saint Martin", "NA"),
    country("MG", "Madagascar", "AF"),
    country("MH", "Marshall Islands", "OC"),
    country("MK", "North Macedonia", "EU"),
    country("ML", "Mali", "AF"),
    country("MM", "Myanmar", "AS"),
    country("MN", "Mongolia", "AS"),
    country("MO", "Macao", "AS"),
    country("MP", "Northern Mariana Islands", "OC"),
    country("MQ", "Martinique", "NA"),
    country("MR", "Mauritania", "AF"),
    country("MS", "Montserrat", "NA"),
    country("MT", "Malta", "EU"),
    country("MU", "Mauritius", "AF"),
    country("MV", "Maldives", "AS"),
    country("MW", "Malawi", "AF"),
    country("MX", "Mexico", "NA"),
    country("MY", "Malaysia", "AS"),
    country("MZ", "Mozambique", "AF"),
    country("NA", "Namibia", "AF"),
    country("NC", "New Caledonia", "OC"),
    country("NE", "Niger", "AF"),
    country("NF", "Norfolk Island", "OC"),
    country("NG", "Nigeria", "AF"),
    country("NI", "Nicaragua", "NA"),
    country("NL", "Netherlands", "EU"),
    country("NO", "Norway", "EU"),
    country("NP", "Nepal", "AS"),
    country("NR", "Nauru", "OC"),
    country("NU", "Niue", "OC"),
    country("NZ", "New Zealand", "OC"),
    country("OM", "Oman", "AS"),
    country("PA", "Panama", "NA"),
    country("PE", "Peru", "SA"),
    country("PF", "French Polynesia", "OC"),
    country("PG", "Papua New Guinea", "OC"),
    country("PH", "Philippines", "AS"),
    country("PK", "Pakistan", "AS"),
    country("PL", "Poland", "EU"),
    country("PM", "Saint Pierre and Miquelon", "NA"),
    country("PN", "Pitcairn Islands", "OC"),
    country("PR", "Puerto Rico", "NA"),
    country("PS", "Palestine", "AS"),
    country("PT", "Portugal", "EU"),
    country("PW", "Palau", "OC"),
    country("PY", "Paraguay", "SA"),
    country("QA", "Qatar", "AS"),
    country("RE", "Réunion", "AF"),
    country("RO", "Romania", "EU"),
    country("RS", "Serbia", "EU"),
    country("RU", "Russia", "EU"),
    country("RW", "Rwanda", "AF"),
    country("SA", "Saudi Arabia", "AS"),
    country("SB", "Solomon Islands", "OC"),
    country("SC", "Seychelles", "AF"),
    country("SD", "Sudan", "AF"),
    country("SE", "Sweden", "EU"),
    country("SG", "Singapore", "AS"),
    country("SH", "Saint Helena", "AF"),
    country("SI", "Slovenia", "EU"),
    country("SJ", "Svalbard and Jan Mayen", "EU"),
    country("SK", "Slovakia", "EU"),
    country("SL", "Sierra Leone", "AF"),
    country("SM", "San Marino", "EU"),
    country("SN", "Senegal", "AF"),
    country("SO", "Somalia", "AF"),
    country("SR", "Suriname", "SA"),
    country("SS", "South Sudan", "AF"),
    country("ST", "São Tomé and Príncipe", "AF"),
    country("SV", "El Salvador", "NA"),
    country("SX", "Sint Maarten", "NA"),
    country("SY", "Syria", "AS"),
    country("SZ", "Eswatini", "AF"),
    country("TC", "Turks and Caicos Islands", "NA"),
    country("TD", "Chad", "AF"),
    country("TF", "French Southern Territories", "AN"),
    country("TG", "Togo", "AF"),
    country("TH", "Thailand", "AS"),
    country("TJ", "Tajikistan", "AS"),
    country("TK", "Tokelau", "OC"),
    country("TL", "Timor-Leste", "OC"),
    country("TM", "Turkmenistan", "AS"),
    country("TN", "Tunisia", "AF"),
    country("TO", "Tonga", "OC"),
    country("TR", "Türkiye", "AS"),
    country("TT", "Trinidad and Tobago", "NA"),
    country("TV", "Tuvalu", "OC"),
    country("TW", "Taiwan", "AS"),
    country("TZ", "Tanzania", "AF"),
    country("UA", "Ukraine", "EU"),
    country("UG", "Uganda", "AF"),
    country("UM", "U.S. Outlying Islands", "OC"),
    country("US", "United States", "NA"),
    country("UY", "Uruguay", "SA"),
    country("UZ", "Uzbekistan", "AS"),
    country("VA", "Vatican City", "EU"),
    country("VC", "St Vincent and Grenadines", "NA"),
    country("VE", "Venezuela", "SA"),
    country("VG", "British Virgin Islands", "NA"),
    country("VI", "U.S. Virgin Islands", "NA"),
    country("VN", "Vietnam", "AS"),
    country("VU", "Vanuatu", "OC"),
    country("WF", "Wallis and Futuna", "OC"),
    country("WS", "Samoa", "OC"),
    country("XK", "Kosovo", "EU"),
    country("YE", "Yemen", "AS"),
    country("YT", "Mayotte", "AF"),
    country("ZA", "South Africa", "AF"),
    country("ZM", "Zambia", "AF"),
    country("ZW", "Zimbabwe", "AF"),
];

/// Look up a country by code, case-insensitively
pub fn lookup(code: &str) -> Option<&'static Country> {
    if code.len() != 2 {
        return None;
    }
    let code = code.to_ascii_uppercase();
    COUNTRIES
        .binary_search_by(|c| c.code.cmp(code.as_str()))
        .ok()
        .map(|i| &COUNTRIES[i])
}

/// English name for a country code
pub fn name(code: &str) -> Option<&'static str> {
    lookup(code).map(|c| c.name)
}

/// Continent code for a country code
pub fn continent(code: &str) -> Option<&'static str> {
    lookup(code).map(|c| c.continent)
}
