use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

struct SeedRole<'a> {
    name: &'a str,
    is_admin: bool,
    can_manage_team: bool,
    description: &'a str,
}

pub async fn seed_all(pool: &PgPool) -> Result<()> {
    seed_roles(pool).await?;
    seed_relationships(pool).await?;
    Ok(())
}

async fn seed_roles(pool: &PgPool) -> Result<()> {
    let roles = vec![
        SeedRole {
            name: "Admin",
            is_admin: true,
            can_manage_team: true,
            description: "Full administration access",
        },
        SeedRole {
            name: "Manager",
            is_admin: false,
            can_manage_team: true,
            description: "Can view team evaluations",
        },
        SeedRole {
            name: "Employee",
            is_admin: false,
            can_manage_team: false,
            description: "",
        },
    ];

    for role in roles {
        sqlx::query(
            r#"
            INSERT INTO roles (id, name, is_admin, can_manage_team, description)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(role.name)
        .bind(role.is_admin)
        .bind(role.can_manage_team)
        .bind(role.description)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// One starter rule so the bulk wizard has a named relationship besides the
/// built-in peer and self choices.
async fn seed_relationships(pool: &PgPool) -> Result<()> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM role_relationships")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(());
    }

    let manager: Option<Uuid> = sqlx::query_scalar("SELECT id FROM roles WHERE name = 'Manager'")
        .fetch_optional(pool)
        .await?;
    let employee: Option<Uuid> = sqlx::query_scalar("SELECT id FROM roles WHERE name = 'Employee'")
        .fetch_optional(pool)
        .await?;

    if let (Some(manager), Some(employee)) = (manager, employee) {
        sqlx::query(
            r#"
            INSERT INTO role_relationships (id, name, reviewer_role_id, reviewee_role_id)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind("Manager Review")
        .bind(manager)
        .bind(employee)
        .execute(pool)
        .await?;
    }
    Ok(())
}
