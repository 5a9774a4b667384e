use async_trait::async_trait;
use uuid::Uuid;

use crate::courses::repo_types::{Course, CourseInput, EnrolledCourse, EnrollmentRow, LinkKind};
use crate::db::PgStore;

const COURSE_COLUMNS: &str = "id, title, description, image_key, created_at, updated_at";

#[async_trait]
pub trait CourseRepo: Send + Sync {
    /// Newest first. `None` lists every course from `offset` on.
    async fn list(&self, limit: Option<i64>, offset: i64) -> anyhow::Result<Vec<Course>>;
    async fn count(&self) -> anyhow::Result<i64>;
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Course>>;
    async fn create(&self, input: CourseInput) -> anyhow::Result<Course>;
    async fn update(&self, id: Uuid, input: CourseInput) -> anyhow::Result<Option<Course>>;
    /// Cascades to the enrollments and favorites of the course.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
    async fn set_image(&self, id: Uuid, image_key: &str) -> anyhow::Result<bool>;

    /// Inserts the (student, course) pair unless present. True when a row was created.
    async fn insert_link(&self, kind: LinkKind, student_id: Uuid, course_id: Uuid) -> anyhow::Result<bool>;
    /// True when a row was deleted.
    async fn delete_link(&self, kind: LinkKind, student_id: Uuid, course_id: Uuid) -> anyhow::Result<bool>;
    async fn has_link(&self, kind: LinkKind, student_id: Uuid, course_id: Uuid) -> anyhow::Result<bool>;
    async fn linked_course_ids(&self, kind: LinkKind, student_id: Uuid) -> anyhow::Result<Vec<Uuid>>;
    async fn count_links(&self, kind: LinkKind) -> anyhow::Result<i64>;

    async fn student_enrollments(&self, student_id: Uuid) -> anyhow::Result<Vec<EnrolledCourse>>;
    async fn all_enrollments(&self) -> anyhow::Result<Vec<EnrollmentRow>>;
    async fn set_grade(&self, enrollment_id: Uuid, grade: Option<&str>) -> anyhow::Result<bool>;
}

#[async_trait]
impl CourseRepo for PgStore {
    async fn list(&self, limit: Option<i64>, offset: i64) -> anyhow::Result<Vec<Course>> {
        // LIMIT NULL is LIMIT ALL
        let rows = sqlx::query_as::<_, Course>(&format!(
            r#"
            SELECT {COURSE_COLUMNS}
              FROM courses
             ORDER BY created_at DESC
             LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn count(&self) -> anyhow::Result<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM courses")
            .fetch_one(&self.db)
            .await?;
        Ok(n)
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Course>> {
        let row = sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn create(&self, input: CourseInput) -> anyhow::Result<Course> {
        let row = sqlx::query_as::<_, Course>(&format!(
            r#"
            INSERT INTO courses (title, description)
            VALUES ($1, $2)
            RETURNING {COURSE_COLUMNS}
            "#
        ))
        .bind(&input.title)
        .bind(&input.description)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn update(&self, id: Uuid, input: CourseInput) -> anyhow::Result<Option<Course>> {
        let row = sqlx::query_as::<_, Course>(&format!(
            r#"
            UPDATE courses
               SET title = $2, description = $3, updated_at = now()
             WHERE id = $1
            RETURNING {COURSE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&input.title)
        .bind(&input.description)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_image(&self, id: Uuid, image_key: &str) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE courses SET image_key = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(image_key)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert_link(&self, kind: LinkKind, student_id: Uuid, course_id: Uuid) -> anyhow::Result<bool> {
        // Concurrent duplicates are absorbed by the unique pair constraint.
        let res = sqlx::query(&format!(
            r#"
            INSERT INTO {} (student_id, course_id)
            VALUES ($1, $2)
            ON CONFLICT (student_id, course_id) DO NOTHING
            "#,
            kind.table()
        ))
        .bind(student_id)
        .bind(course_id)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn delete_link(&self, kind: LinkKind, student_id: Uuid, course_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(&format!(
            "DELETE FROM {} WHERE student_id = $1 AND course_id = $2",
            kind.table()
        ))
        .bind(student_id)
        .bind(course_id)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn has_link(&self, kind: LinkKind, student_id: Uuid, course_id: Uuid) -> anyhow::Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(&format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE student_id = $1 AND course_id = $2)",
            kind.table()
        ))
        .bind(student_id)
        .bind(course_id)
        .fetch_one(&self.db)
        .await?;
        Ok(exists)
    }

    async fn linked_course_ids(&self, kind: LinkKind, student_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(&format!(
            "SELECT course_id FROM {} WHERE student_id = $1",
            kind.table()
        ))
        .bind(student_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn count_links(&self, kind: LinkKind) -> anyhow::Result<i64> {
        let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", kind.table()))
            .fetch_one(&self.db)
            .await?;
        Ok(n)
    }

    async fn student_enrollments(&self, student_id: Uuid) -> anyhow::Result<Vec<EnrolledCourse>> {
        let rows = sqlx::query_as::<_, EnrolledCourse>(
            r#"
            SELECT e.id AS enrollment_id, e.enrolled_at, e.grade,
                   c.id AS course_id, c.title
              FROM enrollments e
              JOIN courses c ON c.id = e.course_id
             WHERE e.student_id = $1
             ORDER BY e.enrolled_at DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn all_enrollments(&self) -> anyhow::Result<Vec<EnrollmentRow>> {
        let rows = sqlx::query_as::<_, EnrollmentRow>(
            r#"
            SELECT e.id, e.enrolled_at, e.grade,
                   u.id AS student_id, u.email AS student_email, u.name AS student_name,
                   c.id AS course_id, c.title AS course_title
              FROM enrollments e
              JOIN users u ON u.id = e.student_id
              JOIN courses c ON c.id = e.course_id
             ORDER BY e.enrolled_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn set_grade(&self, enrollment_id: Uuid, grade: Option<&str>) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE enrollments SET grade = $2 WHERE id = $1")
            .bind(enrollment_id)
            .bind(grade)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
