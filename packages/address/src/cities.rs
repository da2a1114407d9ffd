//! Municipalities excluded from address matching.

/// Large Dutch cities. Addresses here sit in dense urban blocks where a
/// registry match is almost never the farm next to the building.
pub const LARGE_CITIES_NL: &[&str] = &[
    "Amsterdam",
    "Rotterdam",
    "Den Haag",
    "'s-Gravenhage",
    "Utrecht",
    "Eindhoven",
    "Groningen",
    "Tilburg",
    "Almere",
    "Breda",
    "Nijmegen",
    "Apeldoorn",
    "Haarlem",
    "Arnhem",
    "Enschede",
    "Amersfoort",
    "Zaanstad",
    "Haarlemmermeer",
    "'s-Hertogenbosch",
    "Den Bosch",
    "Zwolle",
    "Zoetermeer",
    "Leiden",
    "Maastricht",
    "Dordrecht",
    "Ede",
    "Alphen aan den Rijn",
    "Leeuwarden",
    "Alkmaar",
    "Emmen",
    "Delft",
    "Venlo",
    "Deventer",
    "Helmond",
    "Oss",
    "Amstelveen",
    "Hilversum",
    "Heerlen",
    "Sittard",
    "Purmerend",
    "Roosendaal",
    "Schiedam",
    "Lelystad",
    "Leidschendam",
    "Hoofddorp",
    "Gouda",
    "Hengelo",
    "Vlaardingen",
    "Spijkenisse",
    "Almelo",
];
