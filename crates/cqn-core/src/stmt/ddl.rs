/// Creates the table backing an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub entity: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTable {
    pub entity: String,
    pub if_exists: bool,
}

impl CreateTable {
    pub fn new(entity: impl Into<String>) -> Self {
        CreateTable {
            entity: entity.into(),
        }
    }
}

impl DropTable {
    pub fn new(entity: impl Into<String>) -> Self {
        DropTable {
            entity: entity.into(),
            if_exists: true,
        }
    }
}
